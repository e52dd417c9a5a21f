//! Question table: the fixed onboarding sequence and its branching metadata.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Steps of the onboarding questionnaire, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionId {
    Welcome,
    Household,
    CashAccounts,
    Retirement,
    Investments,
    RealEstate,
    Vehicles,
    OtherAssets,
    Mortgages,
    CreditCards,
    AutoLoans,
    StudentLoans,
    OtherDebts,
    Tasks,
    Review,
}

const ORDER: [QuestionId; 15] = [
    QuestionId::Welcome,
    QuestionId::Household,
    QuestionId::CashAccounts,
    QuestionId::Retirement,
    QuestionId::Investments,
    QuestionId::RealEstate,
    QuestionId::Vehicles,
    QuestionId::OtherAssets,
    QuestionId::Mortgages,
    QuestionId::CreditCards,
    QuestionId::AutoLoans,
    QuestionId::StudentLoans,
    QuestionId::OtherDebts,
    QuestionId::Tasks,
    QuestionId::Review,
];

impl QuestionId {
    /// All steps in order.
    pub fn all() -> &'static [QuestionId] {
        &ORDER
    }

    /// Zero-based position in the flow.
    pub fn index(&self) -> usize {
        ORDER.iter().position(|q| q == self).unwrap_or(0)
    }

    /// The following step, or `None` after `Review`.
    pub fn next(&self) -> Option<QuestionId> {
        ORDER.get(self.index() + 1).copied()
    }

    /// The preceding step, or `None` at `Welcome`.
    pub fn previous(&self) -> Option<QuestionId> {
        self.index().checked_sub(1).and_then(|i| ORDER.get(i).copied())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Household => "household",
            Self::CashAccounts => "cash_accounts",
            Self::Retirement => "retirement",
            Self::Investments => "investments",
            Self::RealEstate => "real_estate",
            Self::Vehicles => "vehicles",
            Self::OtherAssets => "other_assets",
            Self::Mortgages => "mortgages",
            Self::CreditCards => "credit_cards",
            Self::AutoLoans => "auto_loans",
            Self::StudentLoans => "student_loans",
            Self::OtherDebts => "other_debts",
            Self::Tasks => "tasks",
            Self::Review => "review",
        }
    }

    /// Static definition (kind, title, options) for this step.
    pub fn definition(&self) -> &'static QuestionDef {
        definition(*self)
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ORDER
            .iter()
            .find(|q| q.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown question id '{s}'"))
    }
}

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Informational screen; no answer.
    Info,
    /// Pick exactly one option (household type).
    SingleChoice,
    /// "yes" / "no"; "yes" may be itemized with a single count.
    YesNo,
    /// Any subset of options; each itemizable option takes its own count.
    MultiSelect,
}

/// Whether a generated task creates an asset or a liability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Asset,
    Liability,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asset => f.write_str("asset"),
            Self::Liability => f.write_str("liability"),
        }
    }
}

/// What a selected option turns into, and how to ask "how many?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemizeRule {
    pub entity: EntityKind,
    /// Asset or liability category key (e.g. `retirement_401k`).
    pub category: &'static str,
    pub default_name: &'static str,
    pub prompt: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub value: &'static str,
    pub label: &'static str,
    pub itemize: Option<ItemizeRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDef {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub title: &'static str,
    pub options: &'static [AnswerOption],
}

impl QuestionDef {
    /// Look up an option by its wire value.
    pub fn option(&self, value: &str) -> Option<&'static AnswerOption> {
        self.options.iter().find(|o| o.value == value)
    }

    /// Whether any option of this question generates tasks.
    pub fn generates_tasks(&self) -> bool {
        self.options.iter().any(|o| o.itemize.is_some())
    }
}

const fn asset(category: &'static str, default_name: &'static str, prompt: &'static str) -> Option<ItemizeRule> {
    Some(ItemizeRule {
        entity: EntityKind::Asset,
        category,
        default_name,
        prompt,
    })
}

const fn liability(category: &'static str, default_name: &'static str, prompt: &'static str) -> Option<ItemizeRule> {
    Some(ItemizeRule {
        entity: EntityKind::Liability,
        category,
        default_name,
        prompt,
    })
}

const fn opt(value: &'static str, label: &'static str, itemize: Option<ItemizeRule>) -> AnswerOption {
    AnswerOption { value, label, itemize }
}

const NO: AnswerOption = opt("no", "No", None);
const NONE: AnswerOption = opt("none", "None of these", None);

static WELCOME: QuestionDef = QuestionDef {
    id: QuestionId::Welcome,
    kind: QuestionKind::Info,
    title: "Let's map out your net worth",
    options: &[],
};

static HOUSEHOLD: QuestionDef = QuestionDef {
    id: QuestionId::Household,
    kind: QuestionKind::SingleChoice,
    title: "Who are you tracking finances for?",
    options: &[
        opt("individual", "Just me", None),
        opt("couple", "Me and a partner", None),
        opt("family", "My family", None),
    ],
};

static CASH_ACCOUNTS: QuestionDef = QuestionDef {
    id: QuestionId::CashAccounts,
    kind: QuestionKind::YesNo,
    title: "Do you have checking or savings accounts?",
    options: &[
        opt("yes", "Yes", asset("cash", "Cash & Checking", "How many bank accounts do you have?")),
        NO,
    ],
};

static RETIREMENT: QuestionDef = QuestionDef {
    id: QuestionId::Retirement,
    kind: QuestionKind::MultiSelect,
    title: "Which retirement accounts do you have?",
    options: &[
        opt("401k", "401(k) / 403(b)", asset("retirement_401k", "401(k)", "How many 401(k) accounts do you have?")),
        opt("ira", "Traditional IRA", asset("retirement_ira", "Traditional IRA", "How many Traditional IRAs do you have?")),
        opt("roth", "Roth IRA", asset("retirement_roth", "Roth IRA", "How many Roth IRAs do you have?")),
        opt("hsa", "HSA", asset("retirement_hsa", "HSA", "How many HSAs do you have?")),
        opt("pension", "Pension", asset("retirement_pension", "Pension", "How many pensions do you have?")),
        opt(
            "other_retirement",
            "Other retirement",
            asset("retirement_other", "Other Retirement", "How many other retirement accounts do you have?"),
        ),
        NONE,
    ],
};

static INVESTMENTS: QuestionDef = QuestionDef {
    id: QuestionId::Investments,
    kind: QuestionKind::YesNo,
    title: "Do you have a brokerage or investment account?",
    options: &[
        opt("yes", "Yes", asset("brokerage", "Brokerage Account", "How many brokerage accounts do you have?")),
        NO,
    ],
};

static REAL_ESTATE: QuestionDef = QuestionDef {
    id: QuestionId::RealEstate,
    kind: QuestionKind::MultiSelect,
    title: "Do you own any real estate?",
    options: &[
        opt("primary", "Primary residence", asset("real_estate_primary", "Primary Residence", "How many homes do you live in?")),
        opt("rental", "Rental property", asset("real_estate_rental", "Rental Property", "How many rental properties do you have?")),
        opt("land", "Land", asset("real_estate_land", "Land", "How many parcels of land do you have?")),
        NONE,
    ],
};

static VEHICLES: QuestionDef = QuestionDef {
    id: QuestionId::Vehicles,
    kind: QuestionKind::YesNo,
    title: "Do you own any vehicles?",
    options: &[
        opt("yes", "Yes", asset("vehicle", "Vehicle", "How many vehicles do you have?")),
        NO,
    ],
};

static OTHER_ASSETS: QuestionDef = QuestionDef {
    id: QuestionId::OtherAssets,
    kind: QuestionKind::MultiSelect,
    title: "Anything else of value?",
    options: &[
        opt("business", "Business ownership", asset("business", "Business", "How many businesses do you own?")),
        opt("valuables", "Valuables", asset("valuables", "Valuables", "How many valuables do you want to track?")),
        opt("other", "Something else", asset("other", "Other Asset", "How many other assets do you have?")),
        NONE,
    ],
};

static MORTGAGES: QuestionDef = QuestionDef {
    id: QuestionId::Mortgages,
    kind: QuestionKind::YesNo,
    title: "Do you have a mortgage?",
    options: &[
        opt("yes", "Yes", liability("mortgage", "Mortgage", "How many mortgages do you have?")),
        NO,
    ],
};

static CREDIT_CARDS: QuestionDef = QuestionDef {
    id: QuestionId::CreditCards,
    kind: QuestionKind::YesNo,
    title: "Do you carry credit card balances?",
    options: &[
        opt("yes", "Yes", liability("credit_card", "Credit Card", "How many credit cards do you have?")),
        NO,
    ],
};

static AUTO_LOANS: QuestionDef = QuestionDef {
    id: QuestionId::AutoLoans,
    kind: QuestionKind::YesNo,
    title: "Do you have any auto loans?",
    options: &[
        opt("yes", "Yes", liability("auto_loan", "Auto Loan", "How many auto loans do you have?")),
        NO,
    ],
};

static STUDENT_LOANS: QuestionDef = QuestionDef {
    id: QuestionId::StudentLoans,
    kind: QuestionKind::YesNo,
    title: "Do you have student loans?",
    options: &[
        opt("yes", "Yes", liability("student_loan", "Student Loan", "How many student loans do you have?")),
        NO,
    ],
};

static OTHER_DEBTS: QuestionDef = QuestionDef {
    id: QuestionId::OtherDebts,
    kind: QuestionKind::YesNo,
    title: "Any other debts?",
    options: &[
        opt("yes", "Yes", liability("other", "Other Debt", "How many other debts do you have?")),
        NO,
    ],
};

static TASKS: QuestionDef = QuestionDef {
    id: QuestionId::Tasks,
    kind: QuestionKind::Info,
    title: "Now let's fill in the details",
    options: &[],
};

static REVIEW: QuestionDef = QuestionDef {
    id: QuestionId::Review,
    kind: QuestionKind::Info,
    title: "Review your net worth",
    options: &[],
};

/// Static definition for a step.
pub fn definition(id: QuestionId) -> &'static QuestionDef {
    match id {
        QuestionId::Welcome => &WELCOME,
        QuestionId::Household => &HOUSEHOLD,
        QuestionId::CashAccounts => &CASH_ACCOUNTS,
        QuestionId::Retirement => &RETIREMENT,
        QuestionId::Investments => &INVESTMENTS,
        QuestionId::RealEstate => &REAL_ESTATE,
        QuestionId::Vehicles => &VEHICLES,
        QuestionId::OtherAssets => &OTHER_ASSETS,
        QuestionId::Mortgages => &MORTGAGES,
        QuestionId::CreditCards => &CREDIT_CARDS,
        QuestionId::AutoLoans => &AUTO_LOANS,
        QuestionId::StudentLoans => &STUDENT_LOANS,
        QuestionId::OtherDebts => &OTHER_DEBTS,
        QuestionId::Tasks => &TASKS,
        QuestionId::Review => &REVIEW,
    }
}

/// Task-generation rule for a (question, option) pair, if the option generates tasks.
pub fn itemize_rule(question: QuestionId, option: &str) -> Option<&'static ItemizeRule> {
    definition(question).option(option)?.itemize.as_ref()
}
