use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config;
use crate::data::CsvSource;
use crate::dataset::{self, Dataset};
use crate::links::ImageMode;
use crate::logging;
use crate::session::{self, Event, SessionState};
use crate::ui;
use crate::view;

const DEFAULT_PRINT_WIDTH: usize = 80;

/// Command-line settings that are not plain `--version` / `--help`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub images: Option<PathBuf>,
    pub image_mode: Option<ImageMode>,
    pub image_base: Option<String>,
    pub print: bool,
    pub list_weeks: bool,
    pub week: Option<String>,
    pub page: Option<usize>,
    pub search: Option<String>,
    pub width: Option<usize>,
}

impl Args {
    fn headless(&self) -> bool {
        self.print || self.list_weeks
    }
}

pub fn parse_args<I>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_string(), Some(value.to_string()))
            }
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String> {
            match inline.clone().or_else(|| iter.next()) {
                Some(value) => Ok(value),
                None => bail!("{name} expects a value"),
            }
        };
        match flag.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--data" => parsed.data = Some(PathBuf::from(value("--data")?)),
            "--images" => parsed.images = Some(PathBuf::from(value("--images")?)),
            "--image-mode" => {
                let raw = value("--image-mode")?;
                let mode = ImageMode::parse(&raw).with_context(|| {
                    format!("unknown image mode {raw:?} (expected local, remote or remote_base)")
                })?;
                parsed.image_mode = Some(mode);
            }
            "--image-base" => parsed.image_base = Some(value("--image-base")?),
            "--print" => parsed.print = true,
            "--weeks" => parsed.list_weeks = true,
            "--week" => parsed.week = Some(value("--week")?),
            "--page" => {
                let raw = value("--page")?;
                let page = raw
                    .parse::<usize>()
                    .with_context(|| format!("--page expects a number, got {raw:?}"))?;
                parsed.page = Some(page);
            }
            "--search" => parsed.search = Some(value("--search")?),
            "--width" => {
                let raw = value("--width")?;
                let width = raw
                    .parse::<usize>()
                    .with_context(|| format!("--width expects a number, got {raw:?}"))?;
                parsed.width = Some(width);
            }
            other => bail!("unknown argument {other:?} (see --help)"),
        }
    }
    Ok(parsed)
}

/// Plays the command-line selections through the same reducer the terminal
/// UI uses. Returns the resulting state and any notices raised on the way.
pub fn replay(dataset: &Dataset, args: &Args) -> (SessionState, Vec<String>) {
    let mut events = Vec::new();
    if let Some(week) = &args.week {
        events.push(Event::SelectWeek(week.clone()));
    }
    if let Some(page) = args.page {
        events.push(Event::SetPage(page));
    }
    if let Some(query) = &args.search {
        events.push(Event::TypeSearchInput(query.clone()));
        events.push(Event::ToggleSearch);
    }

    let mut state = SessionState::for_dataset(dataset);
    let mut notices = Vec::new();
    for event in events {
        let transition = session::apply(dataset, &state, event);
        state = transition.state;
        notices.extend(transition.notice);
    }
    (state, notices)
}

pub fn run(args: Args) -> Result<()> {
    let mut cfg = config::load(config::LoadOptions {
        config_file: args.config.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    if let Some(path) = &args.data {
        cfg.data.path = path.clone();
    }
    if let Some(dir) = &args.images {
        cfg.images.dir = dir.clone();
    }
    if let Some(mode) = args.image_mode {
        cfg.images.mode = mode;
    }
    if let Some(base) = &args.image_base {
        cfg.images.base_url = base.clone();
    }

    let target = if args.headless() {
        logging::Target::Stderr
    } else {
        logging::Target::File
    };
    let log_path = logging::init(&cfg.log, target).context("initialize logging")?;
    if let Some(path) = log_path {
        info!(path = %path.display(), "logging to file");
    }

    let source = CsvSource::new(&cfg.data.path);
    let resolver = cfg.image_resolver()?;
    let dataset = dataset::load(&source, &resolver)?;

    if args.list_weeks {
        for week in dataset.weeks() {
            println!("{week}\t{}", dataset.week_len(week));
        }
        return Ok(());
    }

    if args.print {
        let (state, notices) = replay(&dataset, &args);
        for notice in notices {
            eprintln!("notice: {notice}");
        }
        let width = args.width.unwrap_or(DEFAULT_PRINT_WIDTH);
        let rendered = view::render_plain(&view::derive(&dataset, &state), &cfg.ui.title, width);
        print!("{rendered}");
        return Ok(());
    }

    let mut model = ui::Model::new(ui::Options {
        title: cfg.ui.title.clone(),
        dataset,
        source_label: friendly_path(&source),
    });
    model.run()
}

fn friendly_path(source: &CsvSource) -> String {
    let path = source.path();
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            let mut display = String::from("~");
            if !stripped.as_os_str().is_empty() {
                display.push_str(&format!("/{}", stripped.display()));
            }
            return display;
        }
    }
    path.display().to_string()
}
