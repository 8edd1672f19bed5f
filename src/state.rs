use std::sync::Arc;

use crate::{config::Config, store::Store};

pub struct AppState<S> {
    pub store: S,
    pub config: Config,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, config: Config) -> Arc<Self> {
        Arc::new(Self { store, config })
    }
}
