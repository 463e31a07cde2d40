use tracing::debug;

use crate::dataset::Dataset;

pub const EMPTY_SEARCH_NOTICE: &str = "Please enter a search term.";

/// Per-viewer state. Every interaction produces a new value through
/// [`apply`]; nothing else mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub search_active: bool,
    pub search_query: String,
    pub search_input: String,
    pub current_page: usize,
    pub selected_week: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            search_active: false,
            search_query: String::new(),
            search_input: String::new(),
            current_page: 1,
            selected_week: None,
        }
    }
}

impl SessionState {
    /// Initial state for a dataset: newest week selected, first page.
    pub fn for_dataset(dataset: &Dataset) -> Self {
        Self {
            selected_week: dataset.latest_week().map(str::to_string),
            ..Self::default()
        }
    }

    /// Label of the single search/clear button.
    pub fn toggle_label(&self) -> &'static str {
        if self.search_active {
            "Clear search"
        } else {
            "Search"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SelectWeek(String),
    SetPage(usize),
    TypeSearchInput(String),
    ToggleSearch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub notice: Option<String>,
}

impl Transition {
    fn quiet(state: SessionState) -> Self {
        Self {
            state,
            notice: None,
        }
    }
}

/// Number of pages for a week: one record per page, never less than one.
pub fn max_page(dataset: &Dataset, week: Option<&str>) -> usize {
    week.map(|week| dataset.week_len(week)).unwrap_or(0).max(1)
}

fn clamp_page(page: usize, max: usize) -> usize {
    if page == 0 || page > max {
        1
    } else {
        page
    }
}

pub fn apply(dataset: &Dataset, state: &SessionState, event: Event) -> Transition {
    let mut next = state.clone();
    match event {
        Event::SelectWeek(week) => {
            let max = max_page(dataset, Some(&week));
            next.current_page = clamp_page(next.current_page, max);
            next.selected_week = Some(week);
            Transition::quiet(next)
        }
        Event::SetPage(page) => {
            let max = max_page(dataset, next.selected_week.as_deref());
            next.current_page = page.clamp(1, max);
            Transition::quiet(next)
        }
        Event::TypeSearchInput(text) => {
            next.search_input = text;
            Transition::quiet(next)
        }
        Event::ToggleSearch => toggle_search(next),
    }
}

fn toggle_search(mut state: SessionState) -> Transition {
    if state.search_active {
        state.search_active = false;
        state.search_query.clear();
        state.search_input.clear();
        state.current_page = 1;
        debug!("search cleared");
        return Transition::quiet(state);
    }

    let query = state.search_input.trim();
    if query.is_empty() {
        return Transition {
            state,
            notice: Some(EMPTY_SEARCH_NOTICE.to_string()),
        };
    }

    state.search_query = query.to_string();
    state.search_active = true;
    debug!(query = %state.search_query, "search committed");
    Transition::quiet(state)
}
