//! Splits a path into its parent directory and final component.

/// `(parent_crumbs, final_name)`: `parent_crumbs` is a canonical directory
/// path starting with `/`; `final_name` is the last component, empty for
/// the root itself.
pub fn split(path: &str) -> (String, String) {
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let Some((name, parent_components)) = components.split_last() else {
        return ("/".to_string(), String::new());
    };
    let mut parent = String::from("/");
    parent.push_str(&parent_components.join("/"));
    (parent, name.to_string())
}
