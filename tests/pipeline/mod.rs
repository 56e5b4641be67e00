mod metadata_flow;
mod runner;
mod token_flow;
