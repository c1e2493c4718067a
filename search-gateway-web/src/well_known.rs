//! Static files under `/.well-known`, such as the plugin manifest.

use std::path::Path;

use actix_files::Files;
use actix_web::web::ServiceConfig;

/// Serve `dir` under `/.well-known`. Registers nothing if `dir` is `None`.
pub fn configure(config: &mut ServiceConfig, dir: Option<&Path>) {
    if let Some(dir) = dir {
        config.service(Files::new("/.well-known", dir));
    }
}

/// The directory to serve, if one is configured and exists.
pub fn existing_dir(configured: Option<&Path>) -> Option<&Path> {
    let dir = configured?;
    if dir.is_dir() {
        Some(dir)
    } else {
        tracing::info!(
            r#type = "web.well-known.missing",
            dir = %dir.display(),
            "Not serving /.well-known, the directory does not exist"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::existing_dir;
    use std::path::Path;

    #[test]
    fn missing_directories_are_skipped() {
        assert_eq!(existing_dir(None), None);
        assert_eq!(
            existing_dir(Some(Path::new("definitely/not/a/real/dir"))),
            None
        );
        assert_eq!(existing_dir(Some(Path::new("src"))), Some(Path::new("src")));
    }
}
