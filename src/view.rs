use textwrap::{fill, Options as WrapOptions};

use crate::dataset::{Dataset, Record};
use crate::session::SessionState;

pub const SEARCH_HEADER: &str = "Search results";
pub const NO_RESULTS_NOTICE: &str = "No search results.";
pub const NO_WEEK_DATA_NOTICE: &str = "No data for the selected week.";

const PARAGRAPH_INDENT: &str = "    ";

/// Everything the presentation layer needs for one frame, derived fresh
/// from the table and the session state.
#[derive(Debug, Clone, PartialEq)]
pub enum View<'a> {
    Search(SearchResults<'a>),
    Browse(BrowsePage<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults<'a> {
    pub query: String,
    pub matches: Vec<&'a Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePage<'a> {
    pub week: Option<String>,
    pub record: Option<&'a Record>,
    pub page: usize,
    pub max_page: usize,
}

impl BrowsePage<'_> {
    pub fn footer(&self) -> String {
        page_footer(self.page, self.max_page)
    }
}

pub fn page_footer(page: usize, max_page: usize) -> String {
    format!("page {page} / {max_page}")
}

pub fn derive<'a>(dataset: &'a Dataset, state: &SessionState) -> View<'a> {
    if state.search_active {
        return View::Search(SearchResults {
            query: state.search_query.clone(),
            matches: dataset.search(&state.search_query),
        });
    }

    let records = state
        .selected_week
        .as_deref()
        .map(|week| dataset.records_for_week(week))
        .unwrap_or_default();
    let max_page = records.len().max(1);
    let page = state.current_page.clamp(1, max_page);
    View::Browse(BrowsePage {
        week: state.selected_week.clone(),
        record: records.get(page - 1).copied(),
        page,
        max_page,
    })
}

/// Plain-text rendering used by `--print`.
pub fn render_plain(view: &View<'_>, title: &str, width: usize) -> String {
    let width = width.max(20);
    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.chars().count().max(3)));
    out.push_str("\n\n");

    match view {
        View::Search(results) => {
            out.push_str(&format!(
                "{SEARCH_HEADER}: \"{}\" ({})\n",
                results.query,
                results.matches.len()
            ));
            if results.matches.is_empty() {
                out.push('\n');
                out.push_str(NO_RESULTS_NOTICE);
                out.push('\n');
            }
            for record in &results.matches {
                out.push_str(&"-".repeat(width));
                out.push('\n');
                push_record(&mut out, record, width);
            }
        }
        View::Browse(page) => {
            if let Some(week) = &page.week {
                out.push_str(&format!("week {week}\n\n"));
            }
            match page.record {
                Some(record) => {
                    out.push_str(&format!("[{}]\n", record.category));
                    push_record(&mut out, record, width);
                    out.push('\n');
                    out.push_str(&page.footer());
                    out.push('\n');
                }
                None => {
                    out.push_str(NO_WEEK_DATA_NOTICE);
                    out.push('\n');
                }
            }
        }
    }
    out
}

fn push_record(out: &mut String, record: &Record, width: usize) {
    out.push_str(&format!("{}  [{}]\n", record.media, record.date_label()));
    out.push_str(&record.title);
    out.push('\n');
    if !record.contents.is_empty() {
        let options = WrapOptions::new(width).initial_indent(PARAGRAPH_INDENT);
        for paragraph in record.contents.lines() {
            out.push_str(&fill(paragraph, &options));
            out.push('\n');
        }
    }
    if let Some(image) = &record.image {
        out.push_str(&format!("image: {} <{}>\n", image.label(), image.target()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::normalize_date;
    use crate::links::ImageRef;
    use crate::session::{apply, Event};

    fn record(date: &str, title: &str, contents: &str) -> Record {
        Record {
            media: "YTN".into(),
            date: normalize_date(date),
            category: "Cable".into(),
            title: title.into(),
            contents: contents.into(),
            image: None,
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_records(vec![
            record("2024-03-01", "first", "one"),
            record("2024-03-08", "Evening News", ""),
            record("2024-03-01", "second", "two"),
            record("2024-03-01", "third", "cable news roundup"),
            record("", "undated", "no week"),
        ])
    }

    #[test]
    fn browse_picks_record_by_page_in_table_order() {
        let data = dataset();
        let state = SessionState {
            selected_week: Some("2024-03-01".into()),
            current_page: 2,
            ..SessionState::default()
        };
        let View::Browse(page) = derive(&data, &state) else {
            panic!("expected browse view");
        };
        assert_eq!(page.record.map(|r| r.title.as_str()), Some("second"));
        assert_eq!(page.max_page, 3);
        assert_eq!(page.footer(), "page 2 / 3");
    }

    #[test]
    fn browse_empty_week_has_no_record() {
        let data = dataset();
        let state = SessionState {
            selected_week: Some("2020-01-01".into()),
            ..SessionState::default()
        };
        let View::Browse(page) = derive(&data, &state) else {
            panic!("expected browse view");
        };
        assert!(page.record.is_none());
        assert_eq!(page.max_page, 1);
        let text = render_plain(&View::Browse(page), "Report", 60);
        assert!(text.contains(NO_WEEK_DATA_NOTICE));
        assert!(!text.contains("page 1 / 1"));
    }

    #[test]
    fn search_ignores_week_and_page() {
        let data = dataset();
        let mut state = SessionState::for_dataset(&data);
        state = apply(&data, &state, Event::TypeSearchInput("NEWS".into())).state;
        state = apply(&data, &state, Event::ToggleSearch).state;
        state = apply(&data, &state, Event::SelectWeek("2024-03-01".into())).state;
        state = apply(&data, &state, Event::SetPage(3)).state;

        let View::Search(results) = derive(&data, &state) else {
            panic!("expected search view");
        };
        let titles: Vec<&str> = results.matches.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Evening News", "third"]);
    }

    #[test]
    fn search_without_matches_says_so() {
        let data = dataset();
        let state = SessionState {
            search_active: true,
            search_query: "weather".into(),
            ..SessionState::default()
        };
        let text = render_plain(&derive(&data, &state), "Report", 60);
        assert!(text.contains("Search results: \"weather\" (0)"));
        assert!(text.contains(NO_RESULTS_NOTICE));
    }

    #[test]
    fn plain_render_shows_record_fields_and_image() {
        let mut first = record("2024-03-01", "Headline", "Body paragraph");
        first.image = Some(ImageRef::Remote("https://drive.google.com/uc?id=XYZ".into()));
        let data = Dataset::from_records(vec![first]);
        let state = SessionState::for_dataset(&data);
        let text = render_plain(&derive(&data, &state), "Media Trend Report", 60);

        assert!(text.starts_with("Media Trend Report\n"));
        assert!(text.contains("[Cable]"));
        assert!(text.contains("YTN  [2024-03-01]"));
        assert!(text.contains("Headline"));
        assert!(text.contains("    Body paragraph"));
        assert!(text.contains("image: XYZ <https://drive.google.com/uc?id=XYZ>"));
        assert!(text.trim_end().ends_with("page 1 / 1"));
    }
}
