use axum::response::Html;

const SIGN_UP_FORM: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Sign up</title></head>
<body>
  <form id="sign-up">
    <input name="id" placeholder="id" required>
    <input name="email" type="email" placeholder="email" required>
    <input name="password" type="password" minlength="6" placeholder="password" required>
    <input name="passwordCheck" type="password" minlength="6" placeholder="password again" required>
    <input name="nickname" placeholder="nickname" required>
    <textarea name="content" placeholder="about you"></textarea>
    <button type="submit">Sign up</button>
  </form>
  <script>
    document.getElementById("sign-up").addEventListener("submit", async (e) => {
      e.preventDefault();
      const body = Object.fromEntries(new FormData(e.target));
      const res = await fetch("/sign-up", {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(body),
      });
      alert((await res.json()).message);
      if (res.status === 201) location.href = "/sign-in";
    });
  </script>
</body>
</html>
"#;

const SIGN_IN_FORM: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Log-in</title></head>
<body>
  <form id="sign-in">
    <input name="id" placeholder="id" required>
    <input name="password" type="password" placeholder="password" required>
    <button type="submit">Sign in</button>
  </form>
  <script>
    document.getElementById("sign-in").addEventListener("submit", async (e) => {
      e.preventDefault();
      const body = Object.fromEntries(new FormData(e.target));
      const res = await fetch("/sign-in", {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(body),
      });
      if (res.ok) location.href = "/myInfo";
      else alert((await res.json()).message);
    });
  </script>
</body>
</html>
"#;

pub async fn sign_up_form() -> Html<&'static str> {
    Html(SIGN_UP_FORM)
}

pub async fn sign_in_form() -> Html<&'static str> {
    Html(SIGN_IN_FORM)
}
