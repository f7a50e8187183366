pub mod memory;
pub mod models;
pub mod schema;
pub mod scratch;
pub mod sqlite;

mod error;

pub use error::Error;
pub use scratch::{ScratchBackend, ScratchDir, ScratchStore, open_store};

use std::{future::Future, pin::Pin};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
