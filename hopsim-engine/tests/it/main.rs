mod control;
mod timing;
