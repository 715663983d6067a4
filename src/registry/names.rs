//! Helpers for internal class names.

use super::{CLASS_SUFFIX, VERSIONS_PREFIX};

/// Name of the class a nested class belongs to, judged purely by name shape.
///
/// The last `$` in the simple name separates the nested part, so `a/Outer$Inner$1` yields
/// `a/Outer$Inner`. Returns `None` for top-level names, and for names whose simple name starts
/// with `$`.
#[must_use]
pub fn enclosing_class_name(name: &str) -> Option<&str> {
    let simple_start = name.rfind('/').map_or(0, |slash| slash + 1);
    let separator = name[simple_start..].rfind('$')?;
    if separator == 0 {
        return None;
    }
    Some(&name[..simple_start + separator])
}

/// Every enclosing name of `name`, innermost first
pub fn enclosing_class_names(name: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(enclosing_class_name(name), |current| {
        enclosing_class_name(*current)
    })
}

/// The class name an archive entry path stands for.
///
/// Multi-release entries under `META-INF/versions/N/` map to the same name as their base
/// entry. Returns `None` for entries that are not `.class` files.
#[must_use]
pub fn entry_class_name(entry: &str) -> Option<&str> {
    let path = match entry.strip_prefix(VERSIONS_PREFIX) {
        Some(versioned) => &versioned[versioned.find('/')? + 1..],
        None => entry,
    };
    path.strip_suffix(CLASS_SUFFIX)
}

/// The dotted form of an internal name, used in log messages
#[must_use]
pub fn display_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Normalize a marker name given as dotted name, internal name or descriptor into a descriptor.
///
/// ```rust
/// use coderemover::registry::names::marker_descriptor;
///
/// assert_eq!(marker_descriptor("a.b.Remove"), "La/b/Remove;");
/// assert_eq!(marker_descriptor("a/b/Remove"), "La/b/Remove;");
/// assert_eq!(marker_descriptor("La/b/Remove;"), "La/b/Remove;");
/// ```
#[must_use]
pub fn marker_descriptor(name: &str) -> String {
    if name.starts_with('L') && name.ends_with(';') {
        name.to_string()
    } else {
        format!("L{};", name.replace('.', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names() {
        assert_eq!(entry_class_name("p/Outer$1.class"), Some("p/Outer$1"));
        assert_eq!(
            entry_class_name("META-INF/versions/11/p/Outer.class"),
            Some("p/Outer")
        );
        assert_eq!(entry_class_name("META-INF/versions/11"), None);
        assert_eq!(entry_class_name("p/app.properties"), None);
    }

    #[test]
    fn enclosing_names() {
        assert_eq!(enclosing_class_name("p/Outer$Inner"), Some("p/Outer"));
        assert_eq!(enclosing_class_name("p/Outer$Inner$1"), Some("p/Outer$Inner"));
        assert_eq!(enclosing_class_name("Outer$1"), Some("Outer"));
        assert_eq!(enclosing_class_name("p/Outer"), None);
        assert_eq!(enclosing_class_name("p$q/Outer"), None);
        assert_eq!(enclosing_class_name("p/$Proxy"), None);

        let chain: Vec<_> = enclosing_class_names("p/A$B$C$1").collect();
        assert_eq!(chain, ["p/A$B$C", "p/A$B", "p/A"]);
        assert_eq!(enclosing_class_names("p/A").count(), 0);
    }

    #[test]
    fn display() {
        assert_eq!(display_name("java/lang/Object"), "java.lang.Object");
    }
}
