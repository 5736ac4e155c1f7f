//! Query-string builder for the PostgREST filter syntax.

/// Ordered list of query parameters for one REST call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn select(self, columns: &str) -> Self {
        self.push("select", columns.to_owned())
    }

    /// `column=eq.value`
    #[must_use]
    pub fn eq(self, column: &str, value: &str) -> Self {
        self.push(column, format!("eq.{value}"))
    }

    /// `column=in.("a","b")`. Values are quoted so commas and parentheses
    /// inside them survive.
    #[must_use]
    pub fn in_list<S: AsRef<str>>(self, column: &str, values: &[S]) -> Self {
        let quoted: Vec<String> = values.iter().map(|v| quote(v.as_ref())).collect();
        self.push(column, format!("in.({})", quoted.join(",")))
    }

    /// Adds an ordering term. Repeated calls extend the same `order` parameter.
    #[must_use]
    pub fn order(mut self, column: &str, descending: bool) -> Self {
        let term = format!("{column}.{}", if descending { "desc" } else { "asc" });
        if let Some((_, existing)) = self.params.iter_mut().find(|(k, _)| k == "order") {
            existing.push(',');
            existing.push_str(&term);
            return self;
        }
        self.push("order", term)
    }

    #[must_use]
    pub fn range(self, offset: u32, limit: u32) -> Self {
        self.push("offset", offset.to_string())
            .push("limit", limit.to_string())
    }

    #[must_use]
    pub fn limit(self, limit: u32) -> Self {
        self.push("limit", limit.to_string())
    }

    #[must_use]
    pub fn on_conflict(self, columns: &str) -> Self {
        self.push("on_conflict", columns.to_owned())
    }

    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_owned(), value));
        self
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(q: &Query) -> Vec<(&str, &str)> {
        q.params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn builds_filters_in_call_order() {
        let q = Query::new()
            .select("id,text")
            .eq("subject", "Obstetrics & Gynaecology")
            .order("created_at", true)
            .range(15, 16);
        assert_eq!(
            pairs(&q),
            [
                ("select", "id,text"),
                ("subject", "eq.Obstetrics & Gynaecology"),
                ("order", "created_at.desc"),
                ("offset", "15"),
                ("limit", "16"),
            ]
        );
    }

    #[test]
    fn in_list_quotes_each_value() {
        let q = Query::new().in_list("question_id", &["a", "b,c", "say \"hi\""]);
        assert_eq!(
            pairs(&q),
            [("question_id", r#"in.("a","b,c","say \"hi\"")"#)]
        );
    }

    #[test]
    fn repeated_order_extends_one_parameter() {
        let q = Query::new()
            .order("attempted_at", false)
            .order("question_id", false);
        assert_eq!(pairs(&q), [("order", "attempted_at.asc,question_id.asc")]);
    }
}
