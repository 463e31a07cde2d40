const HELP: &str = "mediaweek — Browse weekly media-mention reports from the terminal.

Usage: mediaweek [OPTIONS]

  --data PATH            Dataset CSV (default: mediaweek.csv)
  --images DIR           Local image directory (default: image)
  --image-mode MODE      local | remote | remote_base
  --image-base URL       Base URL joined with the `file` column (remote_base)
  --config PATH          Config file (default: ~/.config/mediaweek/config.yaml)
  --print                Render one view as plain text and exit
  --week KEY             Week to show with --print (YYYY-MM-DD)
  --page N               Page to show with --print
  --search TEXT          Search titles and contents with --print
  --width N              Wrap width for --print (default: 80)
  --weeks                List week keys with record counts and exit
  --version, -V          Show version and exit
  --help,    -h          Show this help message";

fn main() {
    if handle_cli_flags() {
        return;
    }

    let args = match mediaweek::app::parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    };

    if let Err(err) = mediaweek::run(args) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("mediaweek {}", mediaweek::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
