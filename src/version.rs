// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the RAG chat client

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-streaming-rag-2025-10-19";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

pub const VERSION_MAJOR: u32 = 0;

pub const VERSION_MINOR: u32 = 1;

pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2025-10-19";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "resilient-requests",
    "fixed-delay-retry",
    "lru-embedding-cache",
    "batched-embeddings",
    "similarity-search",
    "keyword-rerank",
    "sse-token-streaming",
    "cancellation",
    "vietnamese-messages",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("{} ({})", VERSION, BUILD_DATE)
}

/// Check whether a feature is supported
pub fn has_feature(feature: &str) -> bool {
    FEATURES.contains(&feature)
}
