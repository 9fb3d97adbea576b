use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) use json::results_document;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, plan: &zkload_core::RunPlan);
    fn print_summary(&self, report: &zkload_core::RunReport) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
