// Базовые модули
pub mod config;
pub mod metrics;
pub mod lock;
pub mod util;   // src/util/mod.rs

// Модель данных и сериализация
pub mod value;
pub mod converter;

// Контракт стора + бэкенды
pub mod store;  // src/store/{mod,state,memory,local}.rs

// Снапшоты: in-memory форма и on-disk папка
pub mod snapshot;
pub mod snapdir;

// Запись и перечисление
pub mod writer;
pub mod tree;

// Пайплайны команд
pub mod dump;
pub mod restore;
pub mod update;
pub mod clean;

// diff / watch для update и doc --watch
pub mod diff;
pub mod watch;

// Удобные реэкспорты
pub use config::ToolConfig;
pub use converter::{Converter, TimestampEncoding};
pub use snapshot::{CollectionFilter, DocItem, DocTree, Snapshot};
pub use store::{
    DocSnapshot, DocumentStore, LocalStore, MemoryStore, SetOptions, WriteBatch, MAX_BATCH_OPS,
};
pub use value::{Document, Fields, StoreValue};
pub use writer::{BatchWriter, SingleWriteReport, WriteGate, WriteProgress};
