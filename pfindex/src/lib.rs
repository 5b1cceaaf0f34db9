//! # pfindex - Index des noms de fichiers exportés
//!
//! Cette crate associe à chaque nom de fichier canonique (par exemple
//! `20240101T000000000000Z-IMG_0001.JPG`) l'identifiant de la photo source
//! qui le produit.
//!
//! ## Composants
//!
//! - [`template`] : rendu du nom canonique à partir d'un enregistrement
//! - [`builder`] : construction pure de l'index et de la table des collisions
//! - [`store`] : fichiers sur disque et remplacement atomique
//! - [`monitor`] : reconstruction quand la photothèque change
//! - [`lookup`] : copie en mémoire rechargée quand le fichier change
//!
//! ## Exemple
//!
//! ```rust,ignore
//! use pfindex::{IndexConfigExt, IndexMonitor, LookupCache};
//!
//! let store = config.create_index_store()?;
//! let lookup = LookupCache::new(store.index_path());
//! let monitor = IndexMonitor::new(source, store, template, policy, lookup.clone());
//! monitor.ensure_fresh().await?;
//! let handle = monitor.spawn_periodic(config.get_index_refresh_interval());
//! ```

pub mod builder;
pub mod config_ext;
pub mod error;
pub mod lookup;
pub mod monitor;
pub mod source;
pub mod store;
pub mod template;

pub use builder::{BuiltIndex, CollisionPolicy, IndexEntry, build_index, render_key};
pub use config_ext::IndexConfigExt;
pub use error::{IndexError, Result};
pub use lookup::{Lookup, LookupCache};
pub use monitor::{IndexMonitor, RefreshOutcome};
pub use source::{SourceLibrary, SourceRecord};
pub use store::{IndexMetadata, IndexStore, library_slug};
pub use template::{FilenameTemplate, format_timestamp};
