pub mod add;
pub mod args;
pub mod edit;
pub mod export;
pub mod import;
pub mod list;
pub mod presets;
pub mod reconcile;
pub mod remove;
pub mod run;
pub mod settings;
pub mod wake;
