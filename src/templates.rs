use axum::response::Html;
use chrono::{NaiveDateTime, Utc};
use handlebars::{handlebars_helper, Handlebars, TemplateError};
use model::entities::user;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tower_sessions::Session;

use crate::auth::{take_flashes, CurrentUser, Flash};
use crate::errors::AppError;
use crate::helpers;
use crate::schemas::AppState;

/// Partials shared by every page.
const PARTIALS: &[(&str, &str)] = &[
    ("header", include_str!("../templates/partials/header.hbs")),
    ("footer", include_str!("../templates/partials/footer.hbs")),
    ("post_list", include_str!("../templates/partials/post_list.hbs")),
];

const PAGES: &[(&str, &str)] = &[
    ("site/index", include_str!("../templates/site/index.hbs")),
    ("bbs/list", include_str!("../templates/bbs/list.hbs")),
    ("bbs/post", include_str!("../templates/bbs/post.hbs")),
    ("bbs/new", include_str!("../templates/bbs/new.hbs")),
    ("user/profile", include_str!("../templates/user/profile.hbs")),
    ("admin/users", include_str!("../templates/admin/users.hbs")),
    ("errors/404", include_str!("../templates/errors/404.hbs")),
    ("errors/500", include_str!("../templates/errors/500.hbs")),
];

handlebars_helper!(timesince: |value: Json| {
    match value.as_str().and_then(|s| s.parse::<NaiveDateTime>().ok()) {
        Some(dt) => helpers::timesince(dt, Utc::now().naive_utc()),
        None => String::new(),
    }
});

handlebars_helper!(floorsign: |value: Json| {
    value.as_i64().map(helpers::floorsign).unwrap_or_default()
});

handlebars_helper!(pointevent: |value: Json| {
    helpers::pointevent(value.as_i64().unwrap_or_default())
});

/// Register the custom template filters.
fn config_template_filters(registry: &mut Handlebars<'static>) {
    registry.register_helper("timesince", Box::new(timesince));
    registry.register_helper("floorsign", Box::new(floorsign));
    registry.register_helper("pointevent", Box::new(pointevent));
}

/// The compiled template registry.
#[derive(Clone)]
pub struct Templates {
    registry: Arc<Handlebars<'static>>,
}

impl fmt::Debug for Templates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Templates")
            .field("templates", &self.registry.get_templates().len())
            .finish()
    }
}

impl Templates {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();

        for (name, source) in PARTIALS {
            registry.register_partial(name, *source)?;
        }
        for (name, source) in PAGES {
            registry.register_template_string(name, *source)?;
        }
        config_template_filters(&mut registry);

        Ok(Self {
            registry: Arc::new(registry),
        })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, AppError> {
        Ok(self.registry.render(name, data)?)
    }
}

/// Context every page is rendered with.
#[derive(Serialize)]
struct PageContext<'a> {
    app_name: &'a str,
    current_user: Option<&'a user::Model>,
    is_admin: bool,
    flashes: Vec<Flash>,
    #[serde(flatten)]
    page: Value,
}

/// Render `name` with the shared page context and consume pending flashes.
pub async fn render_page<T: Serialize>(
    state: &AppState,
    session: &Session,
    current: &CurrentUser,
    name: &str,
    data: T,
) -> Result<Html<String>, AppError> {
    let page = serde_json::to_value(data).map_err(|e| AppError::Internal(e.to_string()))?;
    let context = PageContext {
        app_name: &state.config.app_name,
        current_user: current.user(),
        is_admin: current.is_admin(),
        flashes: take_flashes(session).await?,
        page,
    };

    Ok(Html(state.templates.render(name, &context)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_templates_compile() {
        let templates = Templates::new().expect("templates should compile");
        for (name, _) in PAGES {
            assert!(templates.registry.has_template(name), "missing {name}");
        }
    }

    #[test]
    fn test_filters_render() {
        let mut registry = Handlebars::new();
        config_template_filters(&mut registry);

        let out = registry
            .render_template(
                "{{floorsign a}}|{{floorsign b}}|{{pointevent c}}|{{timesince d}}|{{timesince e}}",
                &json!({ "a": 1, "b": 9, "c": 3, "d": "2001-01-01T00:00:00", "e": null }),
            )
            .unwrap();

        let parts: Vec<&str> = out.split('|').collect();
        assert_eq!(parts[0], "Sofa");
        assert_eq!(parts[1], "#9");
        assert_eq!(parts[2], "New topic");
        assert!(parts[3].ends_with("years ago"));
        assert_eq!(parts[4], "");
    }

    #[test]
    fn test_error_page_renders() {
        let templates = Templates::new().unwrap();
        let html = templates
            .render(
                "errors/404",
                &json!({ "app_name": "bbs", "flashes": [], "error": "Sorry, page not found" }),
            )
            .unwrap();
        assert!(html.contains("Sorry, page not found"));
    }
}
