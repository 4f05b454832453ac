use crate::assessment::client::Endpoint;
use crate::assessment::interpreter::Expectation;
use crate::assessment::schema::{FieldKind, FieldSpec, FormKind, FormSchema, PayloadShape};

static END_USER_FIELDS: [FieldSpec; 5] = [
    FieldSpec::required("customer_name", "Customer Name", "customer_name", FieldKind::Text)
        .echoed(),
    FieldSpec::required("product_code", "Product Code", "product_code", FieldKind::Text).echoed(),
    FieldSpec::required(
        "issued_qty",
        "Issued Quantity",
        "issued_qty",
        FieldKind::Number { integer: false },
    )
    .echoed(),
    FieldSpec::required(
        "transaction_date",
        "Transaction Date",
        "transaction_date",
        FieldKind::Date,
    )
    .echoed(),
    FieldSpec::optional(
        "purchase_frequency",
        "Purchase Frequency",
        "purchase_frequency",
        FieldKind::Number { integer: true },
    ),
];

/// Purchase-pattern scoring for a single end-user transaction.
pub static END_USER_FORM: FormSchema = FormSchema {
    kind: FormKind::EndUser,
    endpoint: Endpoint::PredictRisk,
    expectation: Expectation::EndUser,
    shape: PayloadShape::Object,
    fields: &END_USER_FIELDS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::form::FormState;
    use crate::assessment::payload;

    #[test]
    fn optional_frequency_is_omitted_when_blank() {
        let mut form = FormState::new(&END_USER_FORM);
        form.set("customer_name", "Acme Labs").expect("known field");
        form.set("product_code", "P-204").expect("known field");
        form.set("issued_qty", "12.5").expect("known field");
        form.set("transaction_date", "2024-03-18").expect("known field");

        let payload = payload::build(&END_USER_FORM, form.fields()).expect("valid form");
        assert_eq!(payload.get("issued_qty"), Some(&serde_json::json!(12.5)));
        assert!(!payload.contains("purchase_frequency"));
    }

    #[test]
    fn rejects_malformed_dates() {
        let mut form = FormState::new(&END_USER_FORM);
        form.set("transaction_date", "18/03/2024").expect("known field");
        let errors = form.validate();
        assert_eq!(
            errors.get("transaction_date"),
            Some("Transaction Date must be a date (YYYY-MM-DD)")
        );
        assert!(!errors.contains("purchase_frequency"));
    }
}
