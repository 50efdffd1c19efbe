//! Deterministic per-event-type body synthesis. Given the same payload the
//! rendered body is always identical — no timestamps or random ids leak
//! into the text.

use std::collections::HashMap;

use serde_json::Value;

pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub struct InAppContent {
    pub title: String,
    pub message: String,
    pub data: HashMap<String, Value>,
}

pub struct PushContent {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, Value>,
}

pub fn welcome_email(username: &str, email: &str) -> EmailContent {
    let text = format!("Hi {username}, welcome aboard! Your account ({email}) is ready to go.");
    EmailContent {
        subject: "Welcome!".to_string(),
        html: format!("<p>{text}</p>"),
        text,
    }
}

pub fn login_alert_email(username: &str, ip: Option<&str>) -> EmailContent {
    let location = ip.unwrap_or("an unknown location");
    let text = format!("Hi {username}, we noticed a new login from {location}. If this wasn't you, reset your password immediately.");
    EmailContent {
        subject: "New login to your account".to_string(),
        html: format!("<p>{text}</p>"),
        text,
    }
}

pub fn reset_password_email(username: &str, reset_token: &str) -> EmailContent {
    let text = format!("Hi {username}, use code {reset_token} to reset your password. This code expires shortly.");
    EmailContent {
        subject: "Reset your password".to_string(),
        html: format!("<p>{text}</p>"),
        text,
    }
}

pub fn login_in_app(ip: Option<&str>) -> InAppContent {
    let location = ip.unwrap_or("an unknown location");
    let mut data = HashMap::new();
    if let Some(ip) = ip {
        data.insert("ip".to_string(), Value::String(ip.to_string()));
    }
    InAppContent {
        title: "New login".to_string(),
        message: format!("A new login was detected from {location}."),
        data,
    }
}

pub fn friend_request_in_app(from_user_id: &str) -> InAppContent {
    let mut data = HashMap::new();
    data.insert("fromUserId".to_string(), Value::String(from_user_id.to_string()));
    InAppContent {
        title: "New friend request".to_string(),
        message: format!("User {from_user_id} sent you a friend request."),
        data,
    }
}

pub fn purchase_push(order_id: &str, total_amount: f64, currency: &str) -> PushContent {
    let mut data = HashMap::new();
    data.insert("orderId".to_string(), Value::String(order_id.to_string()));
    data.insert(
        "totalAmount".to_string(),
        serde_json::Number::from_f64(total_amount)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    );
    data.insert("currency".to_string(), Value::String(currency.to_string()));
    PushContent {
        title: "Order confirmed".to_string(),
        body: format!("Your order {order_id} for {total_amount:.2} {currency} has been placed."),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_email_is_deterministic() {
        let a = welcome_email("alice", "a@x.com");
        let b = welcome_email("alice", "a@x.com");
        assert_eq!(a.subject, b.subject);
        assert_eq!(a.text, b.text);
    }

    #[test]
    fn purchase_push_embeds_order_fields() {
        let content = purchase_push("ORD-1", 59.98, "USD");
        assert_eq!(content.data.get("orderId"), Some(&Value::String("ORD-1".to_string())));
        assert!(content.body.contains("ORD-1"));
    }
}
