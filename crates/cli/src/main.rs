use std::sync::Arc;

use clap::Parser;
use paperjet::{Converter, OutputTarget, ProcessSupervisor, TextPreWrapper};

mod cli;
mod logging;

use cli::Cli;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(error) = run(cli).await {
		eprintln!("error: {error:#}");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let supervisor = Arc::new(ProcessSupervisor::new(cli.supervisor_options()));
	let converter =
		Converter::new(Arc::clone(&supervisor)).with_pre_wrapper(Box::new(pre_wrapper(&cli)));

	let result = converter
		.convert(
			cli.input_source(),
			OutputTarget::file(&cli.output),
			&cli.page_settings(),
			cli.convert_options()?,
		)
		.await;

	// The process is torn down whatever the conversion's outcome.
	supervisor.stop().await;

	result?;
	tracing::info!(target: "pj", output = %cli.output.display(), "conversion finished");
	Ok(())
}

/// The stock text set plus any extensions added on the command line.
fn pre_wrapper(cli: &Cli) -> TextPreWrapper {
	let mut extensions = vec!["txt", "text", "log", "xml"];
	extensions.extend(cli.pre_wrap_ext.iter().map(String::as_str));
	TextPreWrapper::new(&extensions)
}
