//! HTML mail templates.

use crate::mail::OutgoingMail;

const SIGNATURE: &str = "Atenciosamente, <br /><br />Aristóteles";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(lines: &[String]) -> String {
    let mut html = String::from("<html>");
    for line in lines {
        html.push_str(line);
        html.push_str(" <br /><br />");
    }
    html.push_str(SIGNATURE);
    html.push_str("</html>");
    html
}

fn link(url: &str) -> String {
    format!("<a href='{}' target='_blank'>Clique aqui</a>", escape(url))
}

/// Invitation for an address with no account yet.
pub fn signup_invite(to: &str, signup_url: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Convite para cadastro e votação".to_string(),
        html: page(&[
            "Olá!".to_string(),
            "Por favor, selecione o link abaixo para se cadastrar na plataforma e votar.".to_string(),
            link(signup_url),
            "Esse link estará disponível por 24h".to_string(),
        ]),
    }
}

/// Invitation for a registered user.
pub fn login_invite(to: &str, name: &str, login_url: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Convite para votação".to_string(),
        html: page(&[
            format!("Olá, {}!", escape(name)),
            "Por favor, selecione o link abaixo para votar.".to_string(),
            link(login_url),
        ]),
    }
}

pub fn welcome(to: &str, name: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: format!("Bem-vindo, {}", name),
        html: page(&[
            format!("Olá, {}!", escape(name)),
            "Seu cadastro foi efetuado com sucesso!".to_string(),
        ]),
    }
}

pub fn password_recovery(to: &str, name: &str, reset_url: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Recuperação de senha".to_string(),
        html: page(&[
            format!("Olá, {}!", escape(name)),
            "Por favor, selecione o link abaixo para cadastrar sua nova senha.".to_string(),
            link(reset_url),
            "Esse link estará disponível por 24h".to_string(),
        ]),
    }
}
