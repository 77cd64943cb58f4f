mod command;
mod compose_file;
mod config_decl;
mod environment;
mod labels;
mod logging;
mod map_or_empty;
mod network_decl;
mod secret_decl;
mod service;
mod service_networks;
mod services;
mod single_value;
mod sys_ctls;
mod volume_decl;

pub use command::*;
pub use compose_file::*;
pub use config_decl::*;
pub use environment::*;
pub use labels::*;
pub use logging::*;
pub use map_or_empty::*;
pub use network_decl::*;
pub use secret_decl::*;
pub use service::*;
pub use service_networks::*;
pub use services::*;
pub use single_value::*;
pub use sys_ctls::*;
pub use volume_decl::*;
