//! # Product Search
//!
//! A hybrid semantic + fuzzy search service for marketplace product
//! catalogs.
//!
//! The core is a [`HybridIndex`](index::HybridIndex) that ranks a catalog
//! snapshot against a free-text query by combining cosine similarity over
//! embedding vectors with Jaro-Winkler string similarity over the item's
//! text fields, plus a [merger](merge) that searches several rewritten
//! variants of a query and reconciles their rankings.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │ Rewriter │──▶│  Merger   │──▶│ HybridIndex  │──▶ Embedding
//! │ (Gemini) │   │ (max-wins)│   │ cosine+fuzzy │    Provider
//! └──────────┘   └───────────┘   └──────┬───────┘
//!                                       │ atomic corpus swap
//!                                ┌──────┴───────┐
//!                                │   Catalog    │
//!                                │ (JSON / API) │
//!                                └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! psearch serve                         # start the HTTP API
//! psearch search "ifone 14" --top-k 5   # one-shot search against the catalog
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Catalog items and query rewrites |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`fuzzy`] | Jaro-Winkler field scoring |
//! | [`index`] | Hybrid index: rebuild and search |
//! | [`merge`] | Multi-variant result merging |
//! | [`rewrite`] | Query rewriter abstraction |
//! | [`catalog`] | Catalog file loading |
//! | [`server`] | HTTP API |

pub mod catalog;
pub mod config;
pub mod embedding;
pub mod fuzzy;
pub mod index;
pub mod merge;
pub mod models;
pub mod rewrite;
pub mod server;
