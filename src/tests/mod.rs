pub mod helpers;
mod scenarios;
