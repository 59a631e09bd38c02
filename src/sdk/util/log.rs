use env_logger::{Builder, Env};

/// `RUST_LOG` wins when set; otherwise each `-v` raises the level one step.
/// The HTTP stack stays at `warn` unless asked for explicitly.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let default_filter = format!("{level},hyper=warn,hyper_util=warn,reqwest=warn");
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(false)
        .init();
}
