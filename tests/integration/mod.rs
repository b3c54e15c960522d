mod helpers;
mod test_cli;
mod test_pipeline;
