//!
//! Server-side templates.
//!
//! Every `*.html` file under `[views] directory` is loaded at startup and
//! addressed by its path without the extension (`sample/index`). Pages
//! extend `layouts/publicLayout.html` and include files from `partials/`.
//!
//! Helpers available in templates:
//! - `prefix_path(path="/login")` joins a path onto the proxy prefix
//! - `static_path(path="/css/site.css")` joins a path onto `{prefix}/static`
//! - `t(key="welcome", lang=lang)` looks up a message
//!
//! Output goes through tera's HTML escaper. URLs built from configuration
//! are marked `| safe` so their slashes render as written.
//!

use {
    crate::{Config, Error, Result, i18n::translate, utils::join_path},
    axum::response::Html,
    std::{collections::HashMap, path::Path, sync::Arc},
    tera::{Context, Tera, Value},
};

/// Views the default routes render. Their absence is a startup error.
pub const REQUIRED_VIEWS: [&str; 4] = [
    "layouts/publicLayout",
    "sample/index",
    "system/about",
    "system/crawler",
];

#[derive(Clone)]
pub struct Renderer {
    tera: Arc<Tera>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("templates", &self.tera.get_template_names().count())
            .finish()
    }
}

impl Renderer {
    pub fn new(config: &Config) -> Result<Self> {
        let directory = config.views.directory.trim_end_matches('/');
        if !Path::new(directory).is_dir() {
            return Err(Error::config(format!(
                "views.directory `{directory}` is not a directory"
            )));
        }
        let mut tera = Tera::new(&format!("{directory}/**/*.html"))?;

        let prefix = config.prefix().to_string();
        tera.register_function("prefix_path", move |args: &HashMap<String, Value>| {
            Ok(Value::String(join_path(&prefix, path_arg(args))))
        });

        let static_prefix = config.static_prefix();
        tera.register_function("static_path", move |args: &HashMap<String, Value>| {
            Ok(Value::String(join_path(&static_prefix, path_arg(args))))
        });

        let default_lang = config.locale.default.clone();
        tera.register_function("t", move |args: &HashMap<String, Value>| {
            let key = args
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| tera::Error::msg("t() requires a `key` argument"))?;
            let lang = args
                .get("lang")
                .and_then(Value::as_str)
                .unwrap_or(&default_lang);
            Ok(Value::String(translate(lang, key).to_string()))
        });

        let renderer = Renderer {
            tera: Arc::new(tera),
        };
        for view in REQUIRED_VIEWS {
            if !renderer.has_view(view) {
                return Err(Error::config(format!(
                    "view `{view}` not found, expected {}/{view}.html",
                    config.views.directory
                )));
            }
        }
        tracing::debug!(
            templates = renderer.tera.get_template_names().count(),
            "views loaded"
        );
        Ok(renderer)
    }

    pub fn has_view(&self, view: &str) -> bool {
        let name = format!("{view}.html");
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn render(&self, view: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(&format!("{view}.html"), context)?)
    }

    pub fn html(&self, view: &str, context: &Context) -> Result<Html<String>> {
        self.render(view, context).map(Html)
    }
}

fn path_arg(args: &HashMap<String, Value>) -> &str {
    args.get("path").and_then(Value::as_str).unwrap_or("")
}
