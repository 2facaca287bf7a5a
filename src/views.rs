//! Server-rendered pages for the questions resource.

use crate::routes::forgery::TOKEN_FIELD;
use crate::types::question::{Question, QuestionAttributes, QuestionId};

/// The values a form is filled with.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuestionForm<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

impl<'a> From<&'a Question> for QuestionForm<'a> {
    fn from(question: &'a Question) -> Self {
        QuestionForm {
            title: &question.title,
            body: &question.body,
        }
    }
}

impl<'a> From<&'a QuestionAttributes> for QuestionForm<'a> {
    fn from(attributes: &'a QuestionAttributes) -> Self {
        QuestionForm {
            title: attributes.title.as_deref().unwrap_or_default(),
            body: attributes.body.as_deref().unwrap_or_default(),
        }
    }
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn layout(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{}</title>\n\
         </head>\n\
         <body>\n\
         {}\
         </body>\n\
         </html>\n",
        escape(title),
        content
    )
}

pub fn index(questions: &[Question]) -> String {
    let mut content = String::from("<h1>Questions</h1>\n");

    if questions.is_empty() {
        content.push_str("<p>No questions yet.</p>\n");
    } else {
        content.push_str("<table>\n<thead>\n<tr><th>Title</th><th>Body</th><th></th></tr>\n</thead>\n<tbody>\n");
        for question in questions {
            content.push_str(&format!(
                "<tr><td>{title}</td><td>{body}</td>\
                 <td><a href=\"/questions/{id}\">Show</a> \
                 <a href=\"/questions/{id}/edit\">Edit</a></td></tr>\n",
                id = question.id,
                title = escape(&question.title),
                body = escape(&question.body),
            ));
        }
        content.push_str("</tbody>\n</table>\n");
    }

    content.push_str("<a href=\"/questions/new\">New question</a>\n");
    layout("Questions", &content)
}

pub fn show(question: &Question, token: Option<&str>) -> String {
    let content = format!(
        "<h1>{title}</h1>\n\
         <p>{body}</p>\n\
         <p><small>Asked {created}</small></p>\n\
         <a href=\"/questions/{id}/edit\">Edit</a> | <a href=\"/questions\">Back</a>\n\
         <form action=\"/questions/{id}\" method=\"post\">\n\
         <input type=\"hidden\" name=\"_method\" value=\"delete\">\n\
         {token}\
         <button type=\"submit\">Destroy this question</button>\n\
         </form>\n",
        id = question.id,
        title = escape(&question.title),
        body = escape(&question.body),
        created = question.created_at.format("%Y-%m-%d %H:%M UTC"),
        token = token_field(token),
    );
    layout(&question.title, &content)
}

pub fn new_question(form: QuestionForm, errors: &[String], token: Option<&str>) -> String {
    let content = format!(
        "<h1>New question</h1>\n{}<a href=\"/questions\">Back</a>\n",
        question_form("/questions", None, form, errors, token, "Create Question")
    );
    layout("New question", &content)
}

pub fn edit_question(
    id: QuestionId,
    form: QuestionForm,
    errors: &[String],
    token: Option<&str>,
) -> String {
    let action = format!("/questions/{}", id);
    let content = format!(
        "<h1>Editing question</h1>\n{}<a href=\"{action}\">Show</a> | <a href=\"/questions\">Back</a>\n",
        question_form(&action, Some("patch"), form, errors, token, "Update Question"),
        action = action,
    );
    layout("Editing question", &content)
}

fn question_form(
    action: &str,
    method: Option<&str>,
    form: QuestionForm,
    errors: &[String],
    token: Option<&str>,
    submit: &str,
) -> String {
    let mut html = format!(
        "<form action=\"{}\" method=\"post\" accept-charset=\"UTF-8\">\n",
        action
    );
    if let Some(method) = method {
        html.push_str(&format!(
            "<input type=\"hidden\" name=\"_method\" value=\"{}\">\n",
            method
        ));
    }
    html.push_str(&token_field(token));
    html.push_str(&error_list(errors));
    html.push_str(&format!(
        "<div>\n<label for=\"question_title\">Title</label><br>\n\
         <input type=\"text\" name=\"question[title]\" id=\"question_title\" value=\"{}\">\n</div>\n\
         <div>\n<label for=\"question_body\">Body</label><br>\n\
         <textarea name=\"question[body]\" id=\"question_body\">{}</textarea>\n</div>\n\
         <div>\n<input type=\"submit\" name=\"commit\" value=\"{}\">\n</div>\n\
         </form>\n",
        escape(form.title),
        escape(form.body),
        submit
    ));
    html
}

fn token_field(token: Option<&str>) -> String {
    match token {
        Some(token) => format!(
            "<input type=\"hidden\" name=\"{}\" value=\"{}\">\n",
            TOKEN_FIELD,
            escape(token)
        ),
        None => String::new(),
    }
}

fn error_list(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let noun = if errors.len() == 1 { "error" } else { "errors" };
    let mut html = format!(
        "<div id=\"error_explanation\">\n<h2>{} {} prohibited this question from being saved:</h2>\n<ul>\n",
        errors.len(),
        noun
    );
    for error in errors {
        html.push_str(&format!("<li>{}</li>\n", escape(error)));
    }
    html.push_str("</ul>\n</div>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn question(title: &str, body: &str) -> Question {
        let now = Utc::now();
        Question {
            id: QuestionId(4),
            title: title.to_string(),
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape("<script>alert(\"x\") & 'y'</script>"),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn index_escapes_user_content() {
        let page = index(&[question("<b>bold</b>", "a & b")]);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(page.contains("a &amp; b"));
        assert!(page.contains("href=\"/questions/4/edit\""));
        assert!(!page.contains("<b>bold</b>"));
    }

    #[test]
    fn empty_index_still_links_to_new() {
        let page = index(&[]);
        assert!(page.contains("No questions yet."));
        assert!(page.contains("href=\"/questions/new\""));
    }

    #[test]
    fn new_form_posts_to_collection() {
        let page = new_question(QuestionForm::default(), &[], Some("tok"));
        assert!(page.contains("action=\"/questions\""));
        assert!(page.contains("name=\"question[title]\""));
        assert!(page.contains("name=\"question[body]\""));
        assert!(page.contains("name=\"authenticity_token\" value=\"tok\""));
        assert!(page.contains("value=\"Create Question\""));
        assert!(!page.contains("_method"));
    }

    #[test]
    fn forms_omit_token_when_protection_is_off() {
        let page = new_question(QuestionForm::default(), &[], None);
        assert!(!page.contains("authenticity_token"));
    }

    #[test]
    fn edit_form_overrides_method() {
        let stored = question("Title", "Body");
        let page = edit_question(stored.id, QuestionForm::from(&stored), &[], None);
        assert!(page.contains("action=\"/questions/4\""));
        assert!(page.contains("name=\"_method\" value=\"patch\""));
        assert!(page.contains("value=\"Title\""));
        assert!(page.contains(">Body</textarea>"));
        assert!(page.contains("value=\"Update Question\""));
    }

    #[test]
    fn errors_are_counted_and_listed() {
        let one = new_question(
            QuestionForm::default(),
            &["Title can't be blank".to_string()],
            None,
        );
        assert!(one.contains("1 error prohibited this question from being saved:"));
        assert!(one.contains("<li>Title can&#39;t be blank</li>"));

        let two = new_question(
            QuestionForm::default(),
            &["Title can't be blank".to_string(), "Body can't be blank".to_string()],
            None,
        );
        assert!(two.contains("2 errors prohibited"));
    }

    #[test]
    fn show_page_offers_delete_form() {
        let page = show(&question("Title", "Body"), Some("tok"));
        assert!(page.contains("<title>Title</title>"));
        assert!(page.contains("name=\"_method\" value=\"delete\""));
        assert!(page.contains("value=\"tok\""));
    }
}
