mod common;
mod explanation;
mod routing;
