use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use worker::*;

const ADMIN_HASH_KEY: &str = "ADMIN_PASSKEY_HASH";
const CLUB_HASH_KEY: &str = "CLUB_PASSKEY_HASH";

#[event(fetch)]
async fn main(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();

    let router = Router::new();

    router
        .get("/", |_, _| Response::from_html(login_page().into_string()))
        .on_async("/auth", handle_auth)
        .run(req, env)
        .await
}

fn cors_headers() -> Headers {
    let headers = Headers::new();
    let _ = headers.set("Access-Control-Allow-Origin", "*");
    let _ = headers.set("Access-Control-Allow-Methods", "POST, OPTIONS");
    let _ = headers.set("Access-Control-Allow-Headers", "Content-Type");
    headers
}

fn with_cors(mut response: Response) -> Result<Response> {
    let cors = cors_headers();
    for (key, value) in cors.entries() {
        response.headers_mut().set(&key, &value)?;
    }
    Ok(response)
}

fn json_response(status: u16, body: &Value) -> Result<Response> {
    with_cors(Response::from_json(body)?.with_status(status))
}

fn hash_passkey(passkey: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(passkey.as_bytes());
    hex::encode(hasher.finalize())
}

/// Configured digest from a secret or plain var; blank counts as missing.
fn configured_hash(env: &Env, key: &str) -> Option<String> {
    env.secret(key)
        .map(|s| s.to_string())
        .or_else(|_| env.var(key).map(|v| v.to_string()))
        .ok()
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

/// Status and body for a passkey attempt.
///
/// Both digests must be configured; the admin digest is checked first.
fn authenticate(body: &Value, admin_hash: Option<&str>, club_hash: Option<&str>) -> (u16, Value) {
    let passkey = match body.get("passkey").and_then(Value::as_str) {
        Some(passkey) if !passkey.is_empty() => passkey,
        _ => return (400, json!({ "error": "Passkey is required" })),
    };

    let (Some(admin_hash), Some(club_hash)) = (admin_hash, club_hash) else {
        return (500, json!({ "error": "Server configuration error" }));
    };

    let input = hash_passkey(passkey);
    if input == admin_hash {
        (
            200,
            json!({ "success": true, "role": "admin", "message": "Admin access granted" }),
        )
    } else if input == club_hash {
        (
            200,
            json!({ "success": true, "role": "club", "message": "Club member access granted" }),
        )
    } else {
        (401, json!({ "success": false, "error": "Invalid passkey" }))
    }
}

async fn handle_auth(mut req: Request, ctx: RouteContext<()>) -> Result<Response> {
    match req.method() {
        Method::Options => return handle_cors_preflight(),
        Method::Post => {}
        _ => return json_response(405, &json!({ "error": "Method not allowed" })),
    }

    let body: Value = match req.text().await {
        Ok(text) => serde_json::from_str(&text).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    };

    let admin_hash = configured_hash(&ctx.env, ADMIN_HASH_KEY);
    let club_hash = configured_hash(&ctx.env, CLUB_HASH_KEY);
    if admin_hash.is_none() || club_hash.is_none() {
        console_error!("missing {ADMIN_HASH_KEY} or {CLUB_HASH_KEY}");
    }

    let (status, response) = authenticate(&body, admin_hash.as_deref(), club_hash.as_deref());
    json_response(status, &response)
}

fn handle_cors_preflight() -> Result<Response> {
    let mut response = Response::empty()?;
    *response.headers_mut() = cors_headers();
    response
        .headers_mut()
        .set("Access-Control-Max-Age", "86400")?;
    Ok(response)
}

const LOGIN_SCRIPT: &str = r#"
document.getElementById('login').addEventListener('submit', async (event) => {
  event.preventDefault();
  const status = document.getElementById('status');
  const passkey = document.getElementById('passkey').value;
  const res = await fetch('/auth', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ passkey }),
  });
  const data = await res.json();
  status.textContent = data.success ? data.message : (data.error || 'Authentication failed');
  status.className = data.success ? 'ok' : 'err';
});
"#;

fn login_page() -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Archive access" }
                style {
                    "body{font-family:system-ui,sans-serif;display:flex;justify-content:center;padding-top:15vh;background:#f8f8f8}"
                    "form{background:#fff;padding:2rem;border-radius:8px;box-shadow:0 1px 4px rgba(0,0,0,.1);min-width:18rem}"
                    "input,button{width:100%;padding:.5rem;margin-top:.75rem;box-sizing:border-box}"
                    ".ok{color:#2a7}.err{color:#c33}"
                }
            }
            body {
                form #login {
                    h1 { "Archive access" }
                    input #passkey type="password" placeholder="Passkey" autocomplete="current-password" required;
                    button type="submit" { "Enter" }
                    p #status {}
                }
                script { (PreEscaped(LOGIN_SCRIPT)) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes() -> (String, String) {
        (hash_passkey("admin-key"), hash_passkey("club-key"))
    }

    #[test]
    fn admin_passkey_grants_admin() {
        let (admin, club) = hashes();
        let (status, body) = authenticate(&json!({"passkey": "admin-key"}), Some(&admin), Some(&club));
        assert_eq!(status, 200);
        assert_eq!(body["role"], "admin");
        assert_eq!(body["message"], "Admin access granted");
    }

    #[test]
    fn admin_wins_when_hashes_collide() {
        let (admin, _) = hashes();
        let (_, body) = authenticate(&json!({"passkey": "admin-key"}), Some(&admin), Some(&admin));
        assert_eq!(body["role"], "admin");
    }

    #[test]
    fn club_passkey_grants_club() {
        let (admin, club) = hashes();
        let (status, body) = authenticate(&json!({"passkey": "club-key"}), Some(&admin), Some(&club));
        assert_eq!(status, 200);
        assert_eq!(body["role"], "club");
    }

    #[test]
    fn rejects_wrong_or_missing_passkey() {
        let (admin, club) = hashes();
        let (status, body) = authenticate(&json!({"passkey": "nope"}), Some(&admin), Some(&club));
        assert_eq!(status, 401);
        assert_eq!(body["success"], false);

        for body in [json!({}), json!({"passkey": ""}), json!({"passkey": 42}), Value::Null] {
            let (status, _) = authenticate(&body, Some(&admin), Some(&club));
            assert_eq!(status, 400);
        }
    }

    #[test]
    fn missing_configuration_is_a_server_error() {
        let (admin, _) = hashes();
        let (status, _) = authenticate(&json!({"passkey": "x"}), Some(&admin), None);
        assert_eq!(status, 500);
    }

    #[test]
    fn login_page_posts_to_auth() {
        let page = login_page().into_string();
        assert!(page.contains("fetch('/auth'"));
        assert!(page.contains(r#"type="password""#));
    }
}
