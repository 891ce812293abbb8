mod kv;

pub use self::kv::{
    decode_list, encode_list, read_result, write_result, AlertStorage, KvCapability, StorageError,
    StorageKey, MAX_VALUE_SIZE,
};

pub use crux_core::render::Render;
pub use crux_kv::KeyValue;

use crate::event::Event;
// The Effect derive implements `WithContext<App, Effect>` for the struct.
#[allow(unused_imports)]
use crate::App;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub key_value: KeyValue<Event>,
}

impl Capabilities {
    #[must_use]
    pub fn storage(&self) -> AlertStorage<'_> {
        AlertStorage::new(&self.key_value)
    }
}
