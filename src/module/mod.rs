//! Module system: identity, loading, registration, and event routing.
//!
//! - **Manifest**: the immutable per-module descriptor the build cache
//!   compares across builds.
//! - **Loader**: walks compiled artifacts and instantiates modules through
//!   an explicit factory contract.
//! - **Registry**: the only owner of the live module set; enforces routing
//!   id uniqueness and drives ordered shutdown.
//! - **Router**: delivers each inbound event to exactly one module and
//!   brokers module-to-module requests.

pub mod loader;
pub mod manifest;
pub mod registry;
pub mod router;
pub mod traits;

pub use loader::{ManifestModuleFactory, ModuleFactory, ModuleLoader, ENTRY_MARKER};
pub use manifest::{ModuleManifest, MANIFEST_FILE_NAME};
pub use registry::{ModuleHandle, ModuleRegistry};
pub use router::EventRouter;
pub use traits::{
    HostLink, Module, ModuleError, NullRenderer, RendererPort, EVENT_RENDERER_INIT,
    EVENT_SETTINGS_INIT, EVENT_SETTING_MODIFIED, EVENT_SETTING_RESET, EVENT_SWAP_MODULES, HOST_ID,
};
