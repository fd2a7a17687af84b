mod destination;
mod tracing;
mod transfer;
mod validation;
