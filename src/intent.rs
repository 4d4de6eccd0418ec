//! Intent extras and `am start`/`am startservice` option shapes. Replaces
//! the original's dynamic `extras` dict (DESIGN NOTES: dynamic property
//! bags) with a tagged `IntentExtra` variant, grounded on
//! `adb/common/host_transport/startactivity.py`.

use std::collections::BTreeMap;

/// One `--e<type>` intent extra argument.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentExtra {
    Str(String),
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    Uri(String),
    Component(String),
}

impl IntentExtra {
    fn flag(&self) -> &'static str {
        match self {
            IntentExtra::Str(_) => "es",
            IntentExtra::Null => "esn",
            IntentExtra::Bool(_) => "ez",
            IntentExtra::Int(_) => "ei",
            IntentExtra::Long(_) => "el",
            IntentExtra::Float(_) => "el", // matches the original's EXTRA_TYPES typo: float maps to 'l'
            IntentExtra::Uri(_) => "eu",
            IntentExtra::Component(_) => "ecn",
        }
    }

    fn value_arg(&self) -> Option<String> {
        match self {
            IntentExtra::Str(v) | IntentExtra::Uri(v) | IntentExtra::Component(v) => {
                Some(v.clone())
            }
            IntentExtra::Bool(v) => Some(v.to_string()),
            IntentExtra::Int(v) => Some(v.to_string()),
            IntentExtra::Long(v) => Some(v.to_string()),
            IntentExtra::Float(v) => Some(v.to_string()),
            IntentExtra::Null => None,
        }
    }

    fn push_args(&self, key: &str, args: &mut Vec<String>) {
        let flag = format!("--{}", self.flag());
        match self.value_arg() {
            Some(value) => {
                args.push(flag);
                args.push(key.to_string());
                args.push(value);
            }
            None => {
                args.push(flag);
                args.push(key.to_string());
            }
        }
    }
}

/// Options for `am start`/`am startservice`, mirroring
/// `StartActivityCommand`'s option bag.
#[derive(Debug, Clone, Default)]
pub struct IntentOptions {
    pub action: Option<String>,
    pub data: Option<String>,
    pub mime_type: Option<String>,
    pub category: Vec<String>,
    pub component: Option<String>,
    pub flags: Option<String>,
    pub extras: BTreeMap<String, IntentExtra>,
    pub debug: bool,
    pub wait: bool,
    pub user: Option<String>,
}

impl IntentOptions {
    /// Render as the argument list following `am start`/`am startservice`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, extra) in &self.extras {
            extra.push_args(key, &mut args);
        }
        if let Some(action) = &self.action {
            args.push("-a".to_string());
            args.push(action.clone());
        }
        if let Some(data) = &self.data {
            args.push("-d".to_string());
            args.push(data.clone());
        }
        if let Some(mime) = &self.mime_type {
            args.push("-t".to_string());
            args.push(mime.clone());
        }
        for category in &self.category {
            args.push("-c".to_string());
            args.push(category.clone());
        }
        if let Some(component) = &self.component {
            args.push("-n".to_string());
            args.push(component.clone());
        }
        if let Some(flags) = &self.flags {
            args.push("-f".to_string());
            args.push(flags.clone());
        }
        args
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_string_extra() {
        let mut opts = IntentOptions::default();
        opts.extras
            .insert("greeting".to_string(), IntentExtra::Str("hi".to_string()));
        assert_eq!(opts.to_args(), vec!["--es", "greeting", "hi"]);
    }

    #[test]
    fn renders_null_extra_without_value() {
        let mut opts = IntentOptions::default();
        opts.extras.insert("k".to_string(), IntentExtra::Null);
        assert_eq!(opts.to_args(), vec!["--esn", "k"]);
    }

    #[test]
    fn renders_action_data_component() {
        let opts = IntentOptions {
            action: Some("android.intent.action.VIEW".to_string()),
            data: Some("content://x".to_string()),
            component: Some("com.foo/.Bar".to_string()),
            ..Default::default()
        };
        assert_eq!(
            opts.to_args(),
            vec![
                "-a",
                "android.intent.action.VIEW",
                "-d",
                "content://x",
                "-n",
                "com.foo/.Bar"
            ]
        );
    }
}
