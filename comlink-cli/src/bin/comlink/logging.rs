pub fn init(root_module: &str, verbosity: i8) {
	let log_level = match verbosity {
		0 => log::LevelFilter::Info,
		1 => log::LevelFilter::Debug,
		_ => log::LevelFilter::Trace,
	};

	env_logger::Builder::new()
		.format_timestamp(None)
		.format_target(false)
		.filter_level(log::LevelFilter::Warn)
		.filter_module(root_module, log_level)
		.filter_module("comlink", log_level)
		.init();
}
