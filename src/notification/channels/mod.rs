//! 具体展示端实现

pub mod local_file;
pub mod terminal;

pub use local_file::HistoryChannel;
pub use terminal::TerminalPresenter;
