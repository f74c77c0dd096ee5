/*!
# PMJ Membership Management

A small membership register served as a web application. An operator logs in,
adds members, records dues payments and looks at aggregate reports. Everything
is kept in one Excel workbook on local disk.

## Architecture

### Storage Layer
- **TableStore** - loads and saves the `Members` and `Payments` sheets as one
  unit. The workbook is created with headed, empty sheets on first use.
- Whole-file rewrite on every change: the last writer wins, nothing is locked.

### Core
- **MemberRegistry** - adds and lists members, assigning sequential ids
- **PaymentLedger** - records payments against a member id and sums them
- **Reports** - revenue by city, revenue by paid month, headline figures
- **FormController** - validates submitted forms and calls into the above

### Web Layer (`web` feature)
- **Technologies**: axum, handlebars, plotters
- Cookie-based sessions behind an argon2 password check
- Pages: Add Member, Record Payment, Dashboard, Members List, CSV/XLSX export

## Modules

- **models**: Member, Payment and City records
- **store**: TableStore trait with workbook and in-memory implementations
- **registry**: member creation and listing
- **ledger**: payment creation and per-member totals
- **report**: aggregate views
- **form**: form validation and request glue
- **login**: credential file, authentication and sessions
- **downloader**: CSV and XLSX export of the members table
- **graph**: SVG charts for the dashboard
- **config**: application settings
- **app**: routing and middleware
*/

pub mod config;
pub mod downloader;
pub mod error;
pub mod form;
pub mod graph;
pub mod ledger;
pub mod login;
pub mod models;
pub mod registry;
pub mod report;
pub mod store;

#[cfg(feature = "web")]
pub mod app;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use form::{FormController, MemberForm, PaymentForm};
pub use ledger::PaymentLedger;
pub use login::{Authenticator, CredentialAuthenticator, CredentialConfig, Identity, SessionOutcome};
pub use models::{City, Member, NewMember, NewPayment, Payment, Tables};
pub use registry::MemberRegistry;
pub use store::{MemoryStore, TableStore, XlsxStore};
