use std::sync::Arc;

use campus_core::CampusCore;

use crate::chat::hub::Hub;

pub type AppState = Arc<State>;

pub struct State {
    pub core: CampusCore,
    pub hub: Hub,
}

impl State {
    pub fn new(core: CampusCore) -> AppState {
        Arc::new(Self {
            core,
            hub: Hub::default(),
        })
    }
}
