use utoipa::OpenApi;

use crate::skribi::handlers::{
    blog, health, user_data, user_login, user_register, FieldError, ValidationErrors,
};

#[derive(OpenApi)]
#[openapi(
    info(description = "Blogging backend: signup, login and owner-scoped blog posts"),
    paths(
        health::health,
        user_register::createuser,
        user_login::login,
        user_data::getuserdata,
        blog::addblog,
        blog::fetchblogs,
        blog::fetchuserblogs,
        blog::blog_by_id,
        blog::deleteblog,
    ),
    components(schemas(
        user_register::CreateUser,
        user_register::AuthToken,
        user_login::UserLogin,
        user_data::UserData,
        blog::BlogPost,
        FieldError,
        ValidationErrors,
    )),
    tags(
        (name = "auth", description = "Signup, login and profile"),
        (name = "blog", description = "Blog-post CRUD scoped to an owning user"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
