use std::fmt::Display;
use std::fs;
use std::time::Instant;

use camino::Utf8Path;
use console::Style;

const ANSI_BLUE: Style = Style::new().blue();

pub fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Deletes a directory and everything below it. A missing directory is not
/// an error.
pub fn remove_dir(path: &Utf8Path) -> std::io::Result<()> {
    let s = Instant::now();

    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::info!("removed {path} {}", as_overhead(s));
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn test_remove_dir_twice() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let dist = root.join("dist");

        fs::create_dir_all(dist.join("nested")).unwrap();
        fs::write(dist.join("nested/select.js"), "x").unwrap();

        remove_dir(&dist).unwrap();
        assert!(!dist.exists());

        remove_dir(&dist).unwrap();
        assert!(!dist.exists());
    }
}
