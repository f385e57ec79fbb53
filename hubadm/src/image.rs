use libbackend::PullPolicy;

use crate::error::{Error, Result};

/// Image selection flags shared by the inspect, upgrade and migrate commands.
#[derive(Debug, Clone)]
pub struct ImageFlags {
    pub name: String,
    pub tag: String,
    pub pull_policy: PullPolicy,
}

/// Build a full image reference from a name, a tag and optional suffixes
/// inserted before the tag (e.g. `-migration-14-16` for a version-specific
/// migration image).
///
/// The registry host is case-insensitive and lower-cased; the repository
/// path is case-preserved. A tag already present in `name` wins over the
/// `tag` argument. More than one `:` in the final path segment is an error.
pub fn compute_image(name: &str, tag: &str, suffixes: &[&str]) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidImage(name.to_string()));
    }
    let name = lowercase_registry(name);

    let (head, last) = match name.rsplit_once('/') {
        Some((head, last)) => (Some(head), last),
        None => (None, name.as_str()),
    };

    let (repo, tag) = match last.split_once(':') {
        Some((repo, existing_tag)) => {
            if existing_tag.contains(':') {
                return Err(Error::InvalidImage(name.clone()));
            }
            (repo, existing_tag)
        }
        None => (last, tag),
    };

    let mut image = String::new();
    if let Some(head) = head {
        image.push_str(head);
        image.push('/');
    }
    image.push_str(repo);
    for suffix in suffixes {
        image.push_str(suffix);
    }
    image.push(':');
    image.push_str(tag);
    Ok(image)
}

fn lowercase_registry(name: &str) -> String {
    // The registry is the first path segment; a bare repository name has none.
    match name.split_once('/') {
        Some((registry, rest)) => format!("{}/{}", registry.to_lowercase(), rest),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_image() {
        let data = [
            ("registry:5000/path/to/image:foo", "registry:5000/path/to/image:foo", "bar", vec![]),
            ("registry:5000/path/to/image:foo", "REGISTRY:5000/path/to/image:foo", "bar", vec![]),
            ("registry:5000/path/to/image:foo", "REGISTRY:5000/path/to/image:foo", "BAR", vec![]),
            ("registry:5000/path/to/image:bar", "registry:5000/path/to/image", "bar", vec![]),
            ("registry/path/to/image:foo", "registry/path/to/image:foo", "bar", vec![]),
            ("registry/path/to/image:bar", "registry/path/to/image", "bar", vec![]),
            (
                "registry:5000/path/to/image-migration-14-16:foo",
                "registry:5000/path/to/image:foo",
                "bar",
                vec!["-migration-14-16"],
            ),
            (
                "registry:5000/path/to/image-migration-14-16:bar",
                "registry:5000/path/to/image",
                "bar",
                vec!["-migration-14-16"],
            ),
            (
                "registry/path/to/image-migration-14-16:foo",
                "registry/path/to/image:foo",
                "bar",
                vec!["-migration-14-16"],
            ),
            (
                "registry/path/to/image-migration-14-16:bar",
                "registry/path/to/image",
                "bar",
                vec!["-migration-14-16"],
            ),
        ];

        for (expected, name, tag, suffixes) in data {
            let actual = compute_image(name, tag, &suffixes).unwrap();
            assert_eq!(actual, expected, "computing image from {name}, {tag}, {suffixes:?}");
        }
    }

    #[test]
    fn test_compute_image_path_case_preserved() {
        let actual = compute_image("REGISTRY:5000/Path/To/Image", "bar", &[]).unwrap();
        assert_eq!(actual, "registry:5000/Path/To/Image:bar");
    }

    #[test]
    fn test_compute_image_rejects_empty_name() {
        assert!(matches!(
            compute_image("", "bar", &[]),
            Err(Error::InvalidImage(_))
        ));
    }

    #[test]
    fn test_compute_image_rejects_extra_colon() {
        assert!(matches!(
            compute_image("registry:path/to/image:tag:tag", "bar", &[]),
            Err(Error::InvalidImage(_))
        ));
    }
}
