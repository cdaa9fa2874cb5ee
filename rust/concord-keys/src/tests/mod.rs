mod fixtures;

mod contexts;
mod grouping;
