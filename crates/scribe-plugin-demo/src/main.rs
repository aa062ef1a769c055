//! Binary entrypoint for the demo format plugin.

use std::io::{self, BufReader, Write};

use scribe_config::{HostConfig, LogFormat};
use scribe_plugin_demo::run;
use scribe_plugins::telemetry;

fn main() {
    let config = HostConfig::default()
        .with_log_filter("warn")
        .with_log_format(LogFormat::Compact);
    drop(telemetry::initialise(&config));

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    if let Err(error) = run(&mut reader, &mut writer) {
        writeln!(io::stderr().lock(), "{error}").ok();
        std::process::exit(1);
    }
}
