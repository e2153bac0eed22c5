/// Recursively merge two TOML values.
///
/// Tables merge key by key; any other overlay value replaces the base value,
/// so arrays such as `always_trusted` are replaced rather than concatenated.
pub fn merge_toml_values(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(key) {
                    merge_toml_values(base_value, value);
                } else {
                    base_table.insert(key.clone(), value.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_tables_merge_and_arrays_replace() {
        let mut base: toml::Value = toml::from_str(
            "[trust]\nalways_trusted = [\"a.test\"]\nprompts_enabled = true\n",
        )
        .unwrap();
        let overlay: toml::Value =
            toml::from_str("[trust]\nalways_trusted = [\"b.test\"]\n").unwrap();

        merge_toml_values(&mut base, &overlay);

        let trust = base.get("trust").unwrap();
        assert_eq!(
            trust.get("always_trusted").unwrap().as_array().unwrap().len(),
            1
        );
        assert_eq!(
            trust.get("always_trusted").unwrap()[0].as_str(),
            Some("b.test")
        );
        assert_eq!(trust.get("prompts_enabled").unwrap().as_bool(), Some(true));
    }
}
