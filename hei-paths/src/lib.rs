//! Where hei keeps its files.
//!
//! Directories follow the XDG layout on every platform. Each module lives in
//! its own directory under [`plugin_dir`], holding one shared library named
//! after that directory:
//!
//! ```text
//! ~/.config/hei/plugins/
//! ├── modules.toml
//! └── classic_formats/
//!     └── libclassic_formats.so
//! ```

use std::path::{Path, PathBuf};

/// Disabled-module list, kept next to the module directories.
pub const MODULE_LIST_FILE: &str = "modules.toml";

/// `$VAR/hei`, falling back to `~/<home_relative>/hei`. Empty values are
/// treated as unset.
fn xdg_home(var: &str, home_relative: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(home_relative)))
        .unwrap_or_else(|| PathBuf::from(home_relative))
        .join("hei")
}

/// `$XDG_CONFIG_HOME/hei`, or `~/.config/hei`.
pub fn config_dir() -> PathBuf {
    xdg_home("XDG_CONFIG_HOME", ".config")
}

/// `$XDG_DATA_HOME/hei`, or `~/.local/share/hei`. The last default search
/// root for game data.
pub fn data_dir() -> PathBuf {
    xdg_home("XDG_DATA_HOME", ".local/share")
}

/// User module directory.
pub fn plugin_dir() -> PathBuf {
    config_dir().join("plugins")
}

/// Platform file extensions used by loadable modules, most specific first.
pub fn module_extensions() -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        &["dylib", "so"]
    } else if cfg!(target_os = "windows") {
        &["dll"]
    } else {
        &["so"]
    }
}

/// Files that may hold module `name` inside `dir`, in lookup order:
/// `<name>.<ext>` then `lib<name>.<ext>` for each extension.
pub fn library_candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    module_extensions()
        .iter()
        .flat_map(|ext| [format!("{name}.{ext}"), format!("lib{name}.{ext}")])
        .map(|file| dir.join(file))
        .collect()
}

/// Module name for a library file: `lib` prefix and every extension removed,
/// so `libfoo.so.1` and `foo.dll` are both `foo`.
pub fn module_name(path: &Path) -> String {
    let file = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or_default();
    let file = file.strip_prefix("lib").unwrap_or(file);
    file.split('.').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_env<R>(var: &str, value: &str, f: impl FnOnce() -> R) -> R {
        let saved = std::env::var_os(var);
        // SAFETY: every test touching the environment is #[serial].
        unsafe { std::env::set_var(var, value) };
        let result = f();
        match saved {
            Some(old) => unsafe { std::env::set_var(var, old) },
            None => unsafe { std::env::remove_var(var) },
        }
        result
    }

    #[test]
    #[serial]
    fn test_plugin_dir_under_xdg_config() {
        let dir = with_env("XDG_CONFIG_HOME", "/srv/cfg", plugin_dir);
        assert_eq!(dir, PathBuf::from("/srv/cfg/hei/plugins"));
    }

    #[test]
    #[serial]
    fn test_data_dir_under_xdg_data() {
        let dir = with_env("XDG_DATA_HOME", "/srv/games", data_dir);
        assert_eq!(dir, PathBuf::from("/srv/games/hei"));
    }

    #[test]
    #[serial]
    fn test_empty_xdg_var_falls_back_to_home() {
        let dir = with_env("XDG_CONFIG_HOME", "", config_dir);
        assert!(dir.ends_with(".config/hei"));
    }

    #[test]
    fn test_library_candidates_order() {
        let candidates = library_candidates(Path::new("/plugins/dds"), "dds");
        let ext = module_extensions()[0];
        assert_eq!(candidates.len(), module_extensions().len() * 2);
        assert_eq!(candidates[0], PathBuf::from(format!("/plugins/dds/dds.{ext}")));
        assert_eq!(candidates[1], PathBuf::from(format!("/plugins/dds/libdds.{ext}")));
    }

    #[test]
    fn test_module_name_strips_prefix_and_extensions() {
        assert_eq!(module_name(Path::new("/p/libclassic_formats.so")), "classic_formats");
        assert_eq!(module_name(Path::new("dds.dll")), "dds");
        assert_eq!(module_name(Path::new("/usr/lib/libfoo.so.1")), "foo");
        assert_eq!(module_name(Path::new("libpak.1.2.dylib")), "pak");
    }
}
