mod batch;
mod resolver;
