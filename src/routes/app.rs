use {
    crate::{RequestContext, Result, state::AppState},
    axum::{extract::State, response::Html},
};

/// The start page, served at `{prefix}/` and `{prefix}/gateway`.
pub async fn index(State(state): State<AppState>, ctx: RequestContext) -> Result<Html<String>> {
    let mut context = tera::Context::new();
    context.insert("lang", ctx.language().unwrap_or(&state.config.locale.default));
    context.insert("principal", &ctx.principal);
    context.insert("blocks", &ctx.blocks);
    state.views.html("sample/index", &context)
}
