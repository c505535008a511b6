mod extraction;
mod export_pipeline;
mod filters;
mod smart_filter;
