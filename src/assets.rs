use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetCatalog {
    pub backgrounds: Vec<ImageAsset>,
    pub miscs: Vec<ImageAsset>,
}

/// Enumerates the bundled background and overlay PNGs under the public
/// asset root. Thumbnails are the public URL paths the front-end serves
/// them from.
pub fn list_catalog(assets_root: &Path) -> io::Result<AssetCatalog> {
    Ok(AssetCatalog {
        backgrounds: list_dir(assets_root.join("backgrounds").as_path(), "/backgrounds")?,
        miscs: list_dir(assets_root.join("miscs").as_path(), "/miscs")?,
    })
}

fn list_dir(dir: &Path, public_prefix: &str) -> io::Result<Vec<ImageAsset>> {
    let mut assets = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(stem) = file_name.strip_suffix(".png") else {
            continue;
        };

        assets.push(ImageAsset {
            id: stem.to_string(),
            name: display_name(stem),
            thumbnail: format!("{public_prefix}/{file_name}"),
        });
    }

    assets.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(assets)
}

fn display_name(stem: &str) -> String {
    stem.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn seed_assets(label: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("vaporwaver-assets-tests-{label}"));
        let _ = fs::remove_dir_all(root.as_path());
        fs::create_dir_all(root.join("backgrounds")).expect("mkdir");
        fs::create_dir_all(root.join("miscs")).expect("mkdir");
        fs::write(root.join("backgrounds/neon-city.png"), b"png").expect("write");
        fs::write(root.join("backgrounds/default.png"), b"png").expect("write");
        fs::write(root.join("backgrounds/readme.txt"), b"text").expect("write");
        fs::write(root.join("miscs/dolphin.png"), b"png").expect("write");
        root
    }

    #[test]
    fn catalog_lists_pngs_with_display_names() {
        let root = seed_assets("catalog");
        let catalog = list_catalog(root.as_path()).expect("catalog should list");

        assert_eq!(catalog.backgrounds.len(), 2);
        assert_eq!(catalog.backgrounds[0].id, "default");
        assert_eq!(catalog.backgrounds[1].id, "neon-city");
        assert_eq!(catalog.backgrounds[1].name, "Neon City");
        assert_eq!(catalog.backgrounds[1].thumbnail, "/backgrounds/neon-city.png");
        assert_eq!(catalog.miscs.len(), 1);
        assert_eq!(catalog.miscs[0].name, "Dolphin");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_asset_root_is_an_error() {
        let root = std::env::temp_dir().join("vaporwaver-assets-tests-missing-root");
        let _ = fs::remove_dir_all(root.as_path());
        assert!(list_catalog(root.as_path()).is_err());
    }

    #[test]
    fn display_name_title_cases_hyphenated_stems() {
        assert_eq!(display_name("vaporwave-sunset"), "Vaporwave Sunset");
        assert_eq!(display_name("default"), "Default");
    }
}
