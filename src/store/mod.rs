// Store adapters (spec §9 design note: "classes holding prepared statements
// map to opaque store adapters per entity, each owning its compiled
// queries"). Each adapter is the only boundary that knows its wire format;
// callers only see the trait.
//
// Only the in-memory backend is implemented — the persistent schema is a
// non-goal (spec §1) — but every adapter is a trait object so a real
// backend slots in without touching callers (spec §6 "storage provider
// selection").

mod credential;
mod registry;
mod roles;
mod translation;

pub use credential::{CredentialStore, InMemoryCredentialStore};
pub use registry::{InMemoryServiceStore, ServicePatch, ServiceStore};
pub use roles::{InMemoryRoleStore, RoleStore};
pub use translation::{InMemoryTranslationStore, TranslationStore};
