// Базовые модули
pub mod consts;
pub mod errors;
pub mod util;

// Формат на диске
pub mod sb; // src/sb/mod.rs

// Пробы устройства и sysfs
pub mod dev;
pub mod geom;
pub mod sentinel;
pub mod sig;
pub mod topology;

// Операции форматирования
pub mod format; // src/format/{mod,writer,reset}.rs

// Инспекция (KEY=value отчёты)
pub mod check;

// Удобные реэкспорты
pub use errors::FormatError;
pub use format::{
    format_device, reset_backing_identity, DeviceRole, FormatPlan, FormatRequest, ResetRequest,
    SbSummary,
};
pub use sb::{CacheMode, CacheReplacement, Superblock};
pub use sentinel::{classify, SentinelKind};
pub use sig::{BlkidProbe, NoForeignSignatures, SignatureProbe};
pub use topology::{resolve_parent, PathExists, SysBlock};
