mod local_context;

pub use local_context::LocalContext;
