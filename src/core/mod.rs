// ─── Archive Access Core ───
// Multi-modal access to archive data: one identifier, served from a local
// file, a database or a remote API.
//
// Architecture:
//   core/
//     parsing/    Filename / object id classification + field extraction
//     version/    Release → version bundles, aliases, layered work versions
//     paths/      Path templates → local paths and archive urls
//     api/        Domain + API profile registry
//     auth/       Token and netrc credentials
//     handles/    Database and remote resource handles
//     downloader/ On-demand file fetches
//     mma/        Origin resolution engine + tool capabilities
//     object/     Data object lifecycle
//     config/     Settings and the shared access environment

pub mod api;
pub mod auth;
pub mod config;
pub mod downloader;
pub mod error;
pub mod handles;
pub mod http;
pub mod mma;
pub mod object;
pub mod parsing;
pub mod paths;
pub mod version;
